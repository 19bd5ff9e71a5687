use std::io::BufRead;

use anyhow::{bail, Context};
use hk3_launcher_core::api::AppSettings;
use hk3_launcher_plugins::factory;
use serde_json::Value;

use crate::app::AppContext;
use crate::commands::cli::SettingsCommand;

pub fn run_settings(ctx: &AppContext, cmd: &SettingsCommand) -> anyhow::Result<i32> {
    match cmd {
        SettingsCommand::Show { json } => show(&ctx.settings, *json)?,
        SettingsCommand::Path => println!("{}", ctx.store.path().display()),
        SettingsCommand::SetKey => {
            let key = read_key(std::io::stdin().lock())?;
            let blob = factory::build_protector()
                .protect(&key)
                .context("encrypting API key")?;
            let mut settings = ctx.store.load_persisted();
            settings.encrypted_gemini_api_key = Some(blob);
            ctx.store.save(&settings)?;
            println!("API key stored.");
        }
        SettingsCommand::ClearKey => {
            let mut settings = ctx.store.load_persisted();
            if settings.encrypted_gemini_api_key.take().is_none() {
                println!("No API key was stored.");
                return Ok(0);
            }
            ctx.store.save(&settings)?;
            println!("API key removed.");
        }
    }
    Ok(0)
}

fn show(settings: &AppSettings, json: bool) -> anyhow::Result<()> {
    let mut value = serde_json::to_value(settings)?;
    if let Some(obj) = value.as_object_mut() {
        if obj.contains_key("encrypted_gemini_api_key") {
            obj.insert(
                "encrypted_gemini_api_key".to_string(),
                Value::String("<set>".to_string()),
            );
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }
    if let Value::Object(obj) = value {
        for (key, val) in obj {
            match val {
                Value::Object(inner) => {
                    for (k, v) in inner {
                        println!("{key}.{k} = {}", plain(&v));
                    }
                }
                other => println!("{key} = {}", plain(&other)),
            }
        }
    }
    Ok(())
}

fn plain(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn read_key(mut input: impl BufRead) -> anyhow::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line).context("reading API key from stdin")?;
    let key = line.trim();
    if key.is_empty() {
        bail!("no API key given on stdin");
    }
    Ok(key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_key_trims_and_rejects_blank() {
        assert_eq!(read_key(&b"  abc123 \n"[..]).unwrap(), "abc123");
        assert!(read_key(&b"\n"[..]).is_err());
        assert!(read_key(&b""[..]).is_err());
    }
}
