//! Integration tests for mapiod

mod support;
mod test_gateway;
mod test_state;
