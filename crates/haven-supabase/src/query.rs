// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! PostgREST filter expressions.

use haven_core::Conversation;

/// Characters PostgREST treats as syntax inside logic trees and lists.
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', '\\', ' '];

/// Quotes a value for use inside `or=(...)` or `in.(...)`.
pub fn quote(value: &str) -> String {
    if !value.contains(RESERVED) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

pub fn eq(value: &str) -> String {
    format!("eq.{value}")
}

pub fn neq(value: &str) -> String {
    format!("neq.{value}")
}

pub fn in_list<I, S>(values: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<String> = values.into_iter().map(|v| quote(v.as_ref())).collect();
    format!("in.({})", items.join(","))
}

/// `or` filter matching rows sent in either direction between the two participants.
pub fn conversation(conversation: &Conversation) -> String {
    let (a, b) = conversation.participants();
    let (a, b) = (quote(a.as_str()), quote(b.as_str()));
    format!("(and(sender.eq.{a},receiver.eq.{b}),and(sender.eq.{b},receiver.eq.{a}))")
}
