//! Unit tests for the LLM SDK
