mod common;

mod apartment_state;
mod routing;
