// MySQL backend over mysql_async
//
// - config: connection options built from a host address and credentials
// - params: conversion between middleware values and mysql_async values
// - executor: the Connector / DriverConnection implementations

pub mod config;
pub mod executor;
pub mod params;

pub use config::{DEFAULT_PORT, build_opts};
pub use executor::{MysqlConnector, MysqlLink};
