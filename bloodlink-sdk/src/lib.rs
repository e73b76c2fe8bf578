//! Wire types shared between the BloodLink server and its clients.

pub mod objects;
