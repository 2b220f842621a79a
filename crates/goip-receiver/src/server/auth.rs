// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway credential check.
//!
//! Exact string comparison on both id and password. No normalization and
//! no constant-time comparison; the password travels in clear text on the
//! wire anyway.

/// Expected gateway credentials.
#[derive(Clone)]
pub struct Credentials {
    device_id: String,
    password: String,
}

impl Credentials {
    pub fn new(device_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            password: password.into(),
        }
    }

    /// Check a (device id, password) pair received from the wire.
    pub fn validate(&self, device_id: &str, password: &str) -> bool {
        validate(device_id, password, &self.device_id, &self.password)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("device_id", &self.device_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn validate(
    device_id: &str,
    password: &str,
    expected_id: &str,
    expected_password: &str,
) -> bool {
    device_id == expected_id && password == expected_password
}
