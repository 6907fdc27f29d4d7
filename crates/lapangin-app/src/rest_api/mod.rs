pub mod booking;
pub mod faq;
pub mod review;
pub mod venue;

/// Upper bound of records returned by listing endpoints
pub const LIST_LIMIT: usize = 1000;
