pub mod rds_server;
