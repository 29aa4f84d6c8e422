// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "comanda";

// =============================================================================
// Configuration
// =============================================================================

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "COMANDA_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "COMANDA_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "COMANDA_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "COMANDA_LOG";

/// Environment variable for debug mode
pub const ENV_DEBUG: &str = "COMANDA_DEBUG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5480;

// =============================================================================
// Environment Variables - PostgreSQL
// =============================================================================

/// Environment variable for the PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "COMANDA_POSTGRES_URL";

// =============================================================================
// PostgreSQL Defaults
// =============================================================================

/// Default maximum pool connections
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Default minimum pool connections kept warm
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// Default pool acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Default idle connection timeout in seconds
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Default connection max lifetime in seconds
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Default statement timeout in seconds (0 = disabled)
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Listing Defaults
// =============================================================================

/// Default page number for offset pagination
pub const DEFAULT_PAGE: u32 = 1;

/// Default items per page for offset pagination
pub const DEFAULT_LIMIT: u32 = 20;

/// Default items per page for cursor pagination
pub const DEFAULT_FEED_LIMIT: u32 = 50;

/// Maximum items per page for any paginated endpoint
pub const MAX_PAGE_LIMIT: u32 = 500;

/// Default number of preview rows attached per parent record
pub const DEFAULT_PREVIEW_LIMIT: u32 = 3;

// =============================================================================
// Shutdown
// =============================================================================

/// Seconds to wait for background tasks before giving up during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
