//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Fractional key allocation
pub const ACTIVITY_KEY_STEP: f64 = 1000.0;
pub const SEED_ACTIVITY_KEY: f64 = 0.0;

// Store composite keys: "<planId>_<YYYY-MM-DD>[_<activityKey>]"
pub const COMPOSITE_KEY_SEPARATOR: char = '_';
pub const ISO_DAY_FORMAT: &str = "%Y-%m-%d";

// Calendar grid
pub const DAYS_PER_WEEK: usize = 7;

// Broadcast event names
pub const EVENT_DATE_ADDED: &str = "dateAdded";
pub const EVENT_DATE_DELETED: &str = "dateDeleted";
pub const EVENT_ACTIVITY_ADDED: &str = "activityAdded";
pub const EVENT_ACTIVITY_DELETED: &str = "activityDeleted";
pub const EVENT_ACTIVITY_UPDATED: &str = "activityUpdated";
pub const EVENT_LOCK_ACTIVITY: &str = "lockActivity";
pub const EVENT_VOTE_ACTIVITY: &str = "voteActivity";

// Store operation names, used in alerts ("Error received from <op> API: ...")
pub const OP_CREATE_PLAN: &str = "createPlan";
pub const OP_GET_PLAN: &str = "getPlan";
pub const OP_ADD_DATE: &str = "addDate";
pub const OP_DELETE_DATE: &str = "deleteDate";
pub const OP_ADD_ACTIVITY: &str = "addActivity";
pub const OP_DELETE_ACTIVITY: &str = "deleteActivity";
pub const OP_UPDATE_ACTIVITY: &str = "updateActivity";
pub const OP_LOCK_ACTIVITY: &str = "lockActivity";
pub const OP_VOTE_ACTIVITY: &str = "voteActivity";
pub const OP_REGISTER_USER: &str = "registerUser";
pub const OP_NEGOTIATE: &str = "negotiate";

// Session defaults
pub const DEFAULT_RECONNECT_DELAYS_MS: [u64; 4] = [0, 2_000, 10_000, 30_000];
pub const CHANGE_FEED_CAPACITY: usize = 256;
