//! Shared pieces for the generators: the settings tree, the error type and
//! the deep merge used to assemble `*.tf.json` documents.

use serde_json::Value as Json;

mod error;
mod settings;

pub use error::{GenerateError, Result};
pub use settings::Settings;

/// Deep-merge `b` into `a`. Objects merge key by key; anything else in `b`
/// replaces what `a` had.
pub fn merge(a: Json, b: Json) -> Json {
    match (a, b) {
        (Json::Object(mut ma), Json::Object(mb)) => {
            for (k, v) in mb {
                let existing = ma.remove(&k).unwrap_or(Json::Null);
                ma.insert(k, merge(existing, v));
            }
            Json::Object(ma)
        }
        (_, v) => v,
    }
}
