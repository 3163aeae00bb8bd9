// service
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1";
pub const DEFAULT_SERVICE_PORT: u16 = 8001;
pub const WS_PATH: &str = "/ws/pose";

// estimator
pub const DEFAULT_ESTIMATOR_CMD: &str = "pose-sidecar";
pub const DEFAULT_MIN_VISIBILITY: f32 = 0.0;

// per-session queues
pub const DEFAULT_QUEUE_DEPTH: usize = 4;
pub const OUTBOUND_QUEUE_DEPTH: usize = 32;

// ~15 fps end-to-end
pub const DEFAULT_FRAME_BUDGET_MS: u64 = 66;

// echoed frames
pub const DEFAULT_JPEG_QUALITY: u8 = 80;
pub const SKELETON_COLOR: [u8; 3] = [0, 255, 0];
pub const JOINT_RADIUS: i64 = 3;
