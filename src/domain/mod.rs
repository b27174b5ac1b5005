// Candle/tick model (C3)
pub mod candle;

// Domain-specific error types (C2 rejections, C6/C8/C10 errors)
pub mod errors;

// Wire/REST request-response contracts (C11)
pub mod schemas;

// Support/resistance and pivot data types (C7/C13)
pub mod sr;

// Per-session subscription sets
pub mod subscription;

// Timeframe parsing and bucket alignment (C1)
pub mod timeframe;

// Input validators (C2)
pub mod validation;
