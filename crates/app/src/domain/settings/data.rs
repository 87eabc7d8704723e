//! Settings Data

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Setting keys.
pub(crate) const USD_FX_RATE_KEY: &str = "usd_fx_rate";
pub(crate) const CONTACT_NUMBER_KEY: &str = "contact_number";
pub(crate) const INSTAGRAM_POSTS_KEY: &str = "instagram_posts";

/// Instagram posts kept on the catalog page; older ones drop off.
pub const MAX_INSTAGRAM_POSTS: usize = 12;

/// Contact number used until an operator sets one.
pub const DEFAULT_CONTACT_NUMBER: &str = "919876543210";

/// Minimum digits accepted for a contact number.
const MIN_CONTACT_DIGITS: usize = 10;

/// A phone number reduced to its digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactNumber(String);

impl ContactNumber {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ContactNumber {
    fn default() -> Self {
        Self(DEFAULT_CONTACT_NUMBER.to_string())
    }
}

impl fmt::Display for ContactNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised when fewer than ten digits remain after stripping punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid phone number")]
pub struct ContactNumberError;

impl FromStr for ContactNumber {
    type Err = ContactNumberError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let digits: String = value.chars().filter(char::is_ascii_digit).collect();

        if digits.len() < MIN_CONTACT_DIGITS {
            return Err(ContactNumberError);
        }

        Ok(Self(digits))
    }
}

/// An Instagram post or reel link, without query string or trailing slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstagramPost(String);

impl InstagramPost {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstagramPost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not an instagram link")]
pub struct InstagramPostError;

impl FromStr for InstagramPost {
    type Err = InstagramPostError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let link = value
            .split_once('?')
            .map_or(value, |(link, _query)| link)
            .trim_end_matches('/');

        if !link.contains("instagram.com") || link.contains(char::is_whitespace) {
            return Err(InstagramPostError);
        }

        Ok(Self(link.to_string()))
    }
}

/// Instagram posts shown on the catalog page, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstagramPosts(Vec<InstagramPost>);

impl InstagramPosts {
    pub fn iter(&self) -> impl Iterator<Item = &InstagramPost> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Put `post` first, dropping the oldest past [`MAX_INSTAGRAM_POSTS`]. Returns
    /// `false` when it was already listed.
    pub fn add(&mut self, post: InstagramPost) -> bool {
        if self.0.contains(&post) {
            return false;
        }

        self.0.insert(0, post);
        self.0.truncate(MAX_INSTAGRAM_POSTS);

        true
    }

    /// Remove by 1-based position as listed, or else the first post whose link
    /// contains `selector`.
    pub fn remove(&mut self, selector: &str) -> Option<InstagramPost> {
        let selector = selector.trim();

        if selector.is_empty() {
            return None;
        }

        let index = selector
            .parse::<usize>()
            .ok()
            .and_then(|position| position.checked_sub(1))
            .filter(|index| *index < self.0.len())
            .or_else(|| self.0.iter().position(|post| post.0.contains(selector)))?;

        Some(self.0.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn punctuation_is_stripped() -> TestResult {
        let number: ContactNumber = "+91 98765-43210".parse()?;

        assert_eq!(number.as_str(), "919876543210");

        Ok(())
    }

    #[test]
    fn short_numbers_are_rejected() {
        assert_eq!("12345".parse::<ContactNumber>(), Err(ContactNumberError));
    }

    fn posts(links: &[&str]) -> TestResult<InstagramPosts> {
        let mut posts = InstagramPosts::default();

        for link in links.iter().rev() {
            posts.add(link.parse()?);
        }

        Ok(posts)
    }

    #[test]
    fn instagram_links_lose_query_and_trailing_slash() -> TestResult {
        let post: InstagramPost = " https://www.instagram.com/reel/C0ffee/?igsh=abc ".parse()?;

        assert_eq!(post.as_str(), "https://www.instagram.com/reel/C0ffee");
        assert_eq!(
            "https://example.com/p/1".parse::<InstagramPost>(),
            Err(InstagramPostError)
        );

        Ok(())
    }

    #[test]
    fn newest_post_comes_first_and_the_list_is_capped() -> TestResult {
        let mut posts = InstagramPosts::default();

        for n in 0..=MAX_INSTAGRAM_POSTS {
            assert!(posts.add(format!("https://instagram.com/p/{n}").parse()?));
        }

        assert!(!posts.add("https://instagram.com/p/12/".parse()?));
        assert_eq!(posts.len(), MAX_INSTAGRAM_POSTS);
        assert_eq!(
            posts.iter().next().map(InstagramPost::as_str),
            Some("https://instagram.com/p/12")
        );
        assert!(posts.iter().all(|post| post.as_str() != "https://instagram.com/p/0"));

        Ok(())
    }

    #[test]
    fn removal_by_position_or_link_fragment() -> TestResult {
        let mut posts = posts(&[
            "https://instagram.com/p/first",
            "https://instagram.com/p/second",
            "https://instagram.com/reel/third",
        ])?;

        assert_eq!(
            posts.remove("2").map(|post| post.to_string()),
            Some("https://instagram.com/p/second".to_string())
        );
        assert_eq!(
            posts.remove("reel").map(|post| post.to_string()),
            Some("https://instagram.com/reel/third".to_string())
        );
        assert_eq!(posts.remove("9"), None);
        assert_eq!(posts.remove(" "), None);
        assert_eq!(posts.len(), 1);

        Ok(())
    }

    #[test]
    fn stored_lists_round_trip_as_json_arrays() -> TestResult {
        let posts = posts(&["https://instagram.com/p/a", "https://instagram.com/p/b"])?;
        let stored = serde_json::to_string(&posts)?;

        assert_eq!(
            stored,
            r#"["https://instagram.com/p/a","https://instagram.com/p/b"]"#
        );
        assert_eq!(serde_json::from_str::<InstagramPosts>(&stored)?, posts);

        Ok(())
    }
}
