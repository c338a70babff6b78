pub mod crowding_api;
