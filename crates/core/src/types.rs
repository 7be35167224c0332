/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Devices are addressed by the string form of their server-side UUID.
///
/// Kept as a string on the client side so that status frames from older
/// servers (or test fixtures) with non-UUID identifiers still decode.
pub type DeviceId = String;
