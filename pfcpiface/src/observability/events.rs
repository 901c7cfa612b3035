//! Canonical structured event names used across `pfcpiface`.

// Session store events.
pub const SESSION_PUT: &str = "session_put";
pub const SESSION_PUT_REJECTED: &str = "session_put_rejected";
pub const SESSION_GET: &str = "session_get";
pub const SESSION_DELETE: &str = "session_delete";
pub const SESSION_DELETE_ALL: &str = "session_delete_all";
pub const SESSION_REMOVE_FAILED: &str = "session_remove_failed";
pub const UE_ADDRESSES_CLAIMED: &str = "ue_addresses_claimed";

// Notification dispatcher events.
pub const NOTIFY_ENQUEUED: &str = "notify_enqueued";
pub const NOTIFY_QUEUE_FULL: &str = "notify_queue_full";
pub const NOTIFY_QUEUE_CLOSED: &str = "notify_queue_closed";
pub const NOTIFY_SEND_ATTEMPT: &str = "notify_send_attempt";
pub const NOTIFY_SEND_OK: &str = "notify_send_ok";
pub const NOTIFY_SEND_RETRY: &str = "notify_send_retry";
pub const NOTIFY_SEND_EXHAUSTED: &str = "notify_send_exhausted";
pub const NOTIFY_SEND_CANCELLED: &str = "notify_send_cancelled";
pub const NOTIFY_WORKER_START: &str = "notify_worker_start";
pub const NOTIFY_WORKER_STOP: &str = "notify_worker_stop";

// Registration events.
pub const PEER_REGISTER_START: &str = "peer_register_start";
pub const SELF_REGISTER_WAITING: &str = "self_register_waiting";
pub const SELF_REGISTER_GATE_OPEN: &str = "self_register_gate_open";
pub const SELF_REGISTER_DUPLICATE_TRIGGER: &str = "self_register_duplicate_trigger";
pub const SELF_REGISTER_NO_LOCAL_IP: &str = "self_register_no_local_ip";

// Gateway registrar events.
pub const GW_REGISTER_REQUEST: &str = "gw_register_request";
pub const GW_UNCLASSIFIED: &str = "gw_unclassified";
pub const GW_ROUTE_REPLACED: &str = "gw_route_replaced";
pub const GW_NEIGHBOR_ADDED: &str = "gw_neighbor_added";
pub const GW_REGISTER_FAILED: &str = "gw_register_failed";
pub const GW_LATCH_SET: &str = "gw_latch_set";

// Slice configuration and datapath events.
pub const SLICE_CONFIG_REQUEST: &str = "slice_config_request";
pub const SLICE_CONFIG_APPLIED: &str = "slice_config_applied";
pub const SLICE_CONFIG_BACKEND_FAILED: &str = "slice_config_backend_failed";
pub const DATAPATH_WIRED: &str = "datapath_wired";
pub const DATAPATH_REWIRE_IGNORED: &str = "datapath_rewire_ignored";
pub const DATAPATH_METERS_INSTALLED: &str = "datapath_meters_installed";

// HTTP and process lifecycle events.
pub const HTTP_DECODE_FAILED: &str = "http_decode_failed";
pub const METRICS_ENCODE_FAILED: &str = "metrics_encode_failed";
pub const HTTP_LISTEN: &str = "http_listen";
pub const HTTP_SHUTDOWN: &str = "http_shutdown";
pub const HTTP_SHUTDOWN_TIMEOUT: &str = "http_shutdown_timeout";
pub const IFACE_START: &str = "iface_start";
pub const IFACE_STOP: &str = "iface_stop";
pub const TASKS_DRAINED: &str = "tasks_drained";
pub const TASKS_DRAIN_TIMEOUT: &str = "tasks_drain_timeout";
