//! PostgreSQL schema definitions
//!
//! The listing engine itself is schema-agnostic; this module owns the
//! tables the orders endpoints query.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initial schema
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description TEXT
);

-- =============================================================================
-- 1. Orders
-- =============================================================================

CREATE TABLE IF NOT EXISTS orders (
    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    user_id BIGINT,
    customer_name TEXT,
    table_number INTEGER,
    status TEXT NOT NULL DEFAULT 'pending',
    payment_method TEXT,
    total DOUBLE PRECISION NOT NULL DEFAULT 0,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- Keyset pagination scans (created_at, id) in descending order
CREATE INDEX IF NOT EXISTS idx_orders_created_at_id ON orders (created_at DESC, id DESC);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders (status);
CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders (user_id);

-- =============================================================================
-- 2. Order items
-- =============================================================================

CREATE TABLE IF NOT EXISTS order_items (
    id BIGINT GENERATED ALWAYS AS IDENTITY PRIMARY KEY,
    order_id BIGINT NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
    product_id BIGINT,
    name TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 1,
    unit_price DOUBLE PRECISION NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items (order_id);
"#;
