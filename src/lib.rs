//! Bazaar - a server-rendered online shop
//!
//! Customers browse products, fill a cart and place orders. Any registered
//! user can list products of their own with an image.

pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod views;
pub mod web;
