use serde::Deserialize;

/// Body returned by the record-creation endpoints on 2xx.
#[derive(Deserialize, Debug)]
pub struct CreateRecordResponse {
    pub id: String,
}
