// Canonical JSON helpers shared by hashing, persistence and the peer wire format.
// Field order comes from the struct declarations, never from a map.
use crate::error::{BlockchainError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Compact JSON exactly as it is fed into SHA-256
pub fn to_canonical_json<T: Serialize + ?Sized>(data: &T) -> Result<String> {
    serde_json::to_string(data)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))
}

/// Serialize an ordered sequence as a JSON array
pub fn serialize_all<T: Serialize>(items: &[T]) -> Result<Vec<u8>> {
    serde_json::to_vec(items)
        .map_err(|e| BlockchainError::Serialization(format!("Serialization failed: {e}")))
}

pub fn deserialize_all<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    serde_json::from_slice(bytes)
        .map_err(|e| BlockchainError::Serialization(format!("Deserialization failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        id: u64,
        name: String,
        values: Vec<i32>,
    }

    #[test]
    fn test_canonical_json_keeps_declaration_order() {
        let data = TestData {
            id: 42,
            name: "test".to_string(),
            values: vec![1, 2],
        };
        assert_eq!(
            to_canonical_json(&data).unwrap(),
            r#"{"id":42,"name":"test","values":[1,2]}"#
        );
    }

    #[test]
    fn test_serialize_all_round_trip() {
        let items = vec![
            TestData {
                id: 1,
                name: "a".into(),
                values: vec![],
            },
            TestData {
                id: 2,
                name: "b".into(),
                values: vec![3],
            },
        ];
        let bytes = serialize_all(&items).unwrap();
        let back: Vec<TestData> = deserialize_all(&bytes).unwrap();
        assert_eq!(items, back);
    }

    #[test]
    fn test_deserialize_invalid_data() {
        let result: Result<Vec<TestData>> = deserialize_all(&[0xFF, 0xFF]);
        assert!(result.is_err());
        let result: Result<TestData> = from_json("{\"id\":1}");
        assert!(result.is_err());
    }
}
