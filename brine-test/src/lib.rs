use brine_core::{Protocol, SecureStore, Value};
use serde::Deserialize;
use serde::de::DeserializeOwned;

pub fn read_test<Test: DeserializeOwned>(v: &str) -> TestFile<Test> {
    let path = format!("tests/vectors/{v}");
    let file = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("reading {v} should succeed: {e:?}"));
    serde_json::from_str(&file).unwrap_or_else(|e| panic!("parsing {v} should succeed: {e:?}"))
}

#[derive(Deserialize)]
pub struct TestFile<T> {
    pub tests: Vec<Test<T>>,
}

#[derive(Deserialize)]
pub struct Test<T> {
    pub name: String,
    #[serde(flatten)]
    pub test_data: T,
}

/// Store configuration shared by fixture files.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    pub secret: String,
    #[serde(default)]
    pub old_secrets: Vec<String>,
    #[serde(default)]
    pub default_duration: Option<u64>,
    #[serde(default)]
    pub protocol: Option<ProtocolName>,
    #[serde(default)]
    pub decode_legacy: bool,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolName {
    V1,
    V2,
}

impl StoreConfig {
    pub fn build(&self) -> SecureStore {
        let mut builder =
            SecureStore::builder(self.secret.as_str()).old_secrets(self.old_secrets.iter().map(String::as_str));
        if let Some(seconds) = self.default_duration {
            builder = builder.default_duration(seconds);
        }
        if let Some(protocol) = self.protocol {
            builder = builder.protocol(match protocol {
                ProtocolName::V1 => Protocol::V1,
                ProtocolName::V2 => Protocol::V2,
            });
        }
        builder
            .decode_legacy(self.decode_legacy)
            .build()
            .expect("fixture store config should build")
    }
}

/// Convert fixture JSON into the codec's data model.
pub fn to_value(json: &serde_json::Value) -> Value {
    Value::serialized(json).expect("fixture data should convert to a value")
}
