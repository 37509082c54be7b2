//! ATT&CK technique tags attached to agent events.

pub const OS_CREDENTIAL_DUMPING_T1003_TAG: &str = "attack-t1003";
pub const DATA_FROM_LOCAL_SYSTEM_T1005_TAG: &str = "attack-t1005";
pub const REMOTE_SERVICES_T1021_TAG: &str = "attack-t1021";
pub const COMMAND_AND_SCRIPTING_INTERPRETER_T1059_TAG: &str = "attack-t1059";
pub const SYSTEM_INFORMATION_DISCOVERY_T1082_TAG: &str = "attack-t1082";
pub const ACCOUNT_MANIPULATION_T1098_TAG: &str = "attack-t1098";
pub const INGRESS_TOOL_TRANSFER_T1105_TAG: &str = "attack-t1105";
pub const BRUTE_FORCE_T1110_TAG: &str = "attack-t1110";
pub const NETWORK_SHARE_DISCOVERY_T1135_TAG: &str = "attack-t1135";
pub const EXPLOITATION_FOR_CLIENT_EXECUTION_T1203_TAG: &str = "attack-t1203";
pub const EXPLOITATION_OF_REMOTE_SERVICES_T1210_TAG: &str = "attack-t1210";
pub const FILE_AND_DIRECTORY_PERMISSIONS_MODIFICATION_T1222_TAG: &str = "attack-t1222";
pub const DATA_ENCRYPTED_FOR_IMPACT_T1486_TAG: &str = "attack-t1486";
pub const UNSECURED_CREDENTIALS_T1552_TAG: &str = "attack-t1552";
pub const SYSTEM_SERVICES_T1569_TAG: &str = "attack-t1569";
