pub mod durations;
