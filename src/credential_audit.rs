// Credential audit: static analysis tests that scan every Rust source file
// for tracing calls mentioning provider credentials or outbound envelopes.
// Both carry the plaintext login and password.
