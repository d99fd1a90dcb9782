//! Tests for the RESP protocol layer

mod codec_tests;
