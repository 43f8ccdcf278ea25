pub const BUS_NAME: &str = "org.instrumentmapper";
pub const BUS_PREFIX: &str = "/org/instrumentmapper";
