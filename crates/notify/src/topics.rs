//! Queue names events are published to.

pub const ORDER_EVENTS: &str = "order_events";
pub const CART_EVENTS: &str = "cart_events";
pub const USER_EVENTS: &str = "user_events";
pub const LOGIN_EVENTS: &str = "login_events";

/// Every topic, in declaration order.
pub const ALL: [&str; 4] = [ORDER_EVENTS, CART_EVENTS, USER_EVENTS, LOGIN_EVENTS];
