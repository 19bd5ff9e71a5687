/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitOutcome {
    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            Self {
                code: status.code(),
                signal: status.signal(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                code: status.code(),
                signal: None,
            }
        }
    }

    /// Shell-style exit code: the code itself, `128 + signal`, or 1.
    pub fn normalized(&self) -> i32 {
        match (self.code, self.signal) {
            (Some(code), _) => code,
            (None, Some(sig)) => 128 + sig,
            (None, None) => 1,
        }
    }

    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("Process exited with code {code}."),
            (None, Some(sig)) => format!("Process terminated by signal {sig}."),
            (None, None) => "Process exited.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_and_describe() {
        let ok = ExitOutcome {
            code: Some(0),
            signal: None,
        };
        assert_eq!(ok.normalized(), 0);
        assert_eq!(ok.describe(), "Process exited with code 0.");

        let killed = ExitOutcome {
            code: None,
            signal: Some(9),
        };
        assert_eq!(killed.normalized(), 137);
        assert_eq!(killed.describe(), "Process terminated by signal 9.");

        let unknown = ExitOutcome {
            code: None,
            signal: None,
        };
        assert_eq!(unknown.normalized(), 1);
        assert_eq!(unknown.describe(), "Process exited.");
    }
}
