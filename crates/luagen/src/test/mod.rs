// Test module organization
mod helpers;

mod test_functions;
