mod sealed;

pub use sealed::{
    CredentialEntry, KeySource, KeyringEntry, KeyringKeySource, KeyringProtector, StaticKey,
};
