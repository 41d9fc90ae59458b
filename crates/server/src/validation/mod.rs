pub mod server_name;
