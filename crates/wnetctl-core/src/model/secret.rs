// Site documents store passwords in clear text (the file is created 0600),
// so secrets are exposed only at serialization time.

use secrecy::{ExposeSecret, SecretString};
use serde::Serializer;

#[allow(clippy::ref_option)]
pub(crate) fn serialize_opt<S: Serializer>(
    value: &Option<SecretString>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}
