pub mod registration_controller;
