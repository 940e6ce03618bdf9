//! Wholesale record encoding.
//!
//! The session store persists each record as a single opaque blob: the
//! complete snapshot is encoded on write and decoded on read, mirroring the
//! full-record (never delta) replication contract.

use serde::{Serialize, de::DeserializeOwned};

use super::store::StoreError;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(StoreError::from)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{Profile, Session, SessionSettings};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn a_whole_session_survives_the_blob() {
        let roster = vec![
            (Uuid::new_v4(), Profile::new("alice")),
            (Uuid::new_v4(), Profile::new("bob")),
        ];
        let session =
            Session::create(Uuid::new_v4(), SessionSettings::default(), &roster, Utc::now())
                .expect("valid roster");
        let bytes = encode(&session).expect("encodes");
        let decoded: Session = decode(&bytes).expect("decodes");
        assert_eq!(decoded, session);
    }

    #[test]
    fn garbage_is_a_codec_error() {
        assert!(matches!(
            decode::<Session>(&[0xff, 0x00, 0x01]),
            Err(StoreError::Codec(_))
        ));
    }
}
