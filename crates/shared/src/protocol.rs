pub const HEALTH_ROUTE: &str = "/healthz";
pub const RECORDS_ROUTE: &str = "/records";
pub const RECORD_ROUTE: &str = "/records/:record_id";
