pub mod greetings;
