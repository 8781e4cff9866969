//! Addresses for the CIFS side channel.
//!
//! Files on the remote host are reached over SMB rather than through the Telnet session. A
//! Windows path such as `C:\Windows\Temp` is turned into an `smb://` URL on the drive's
//! administrative share (`C$`), or on an explicitly mapped share.

use super::Error;

/// The port CIFS listens on unless told otherwise.
pub const DEFAULT_CIFS_PORT: u16 = 445;

/// Where, and as whom, to reach the file shares of a host.
#[derive(Debug, Clone, Copy)]
pub struct SmbTarget<'a> {
    /// The user name, optionally in `DOMAIN\user` form.
    pub username: &'a str,
    /// The password of `username`.
    pub password: &'a str,
    /// The host name or IP address.
    pub address: &'a str,
    /// The CIFS port.
    pub port: u16,
    /// Windows path prefixes that are exported under a share name of their own, as
    /// `(prefix, share)` pairs.
    pub share_mappings: &'a [(String, String)],
}

fn invalid(path: &str, reason: &'static str) -> Error {
    Error::InvalidPath {
        path: path.to_owned(),
        reason,
    }
}

/// Check that `path` looks like `X:` or `X:\...`.
fn validate(path: &str) -> Result<(), Error> {
    let mut chars = path.chars();
    let (drive, colon) = match (chars.next(), chars.next()) {
        (Some(drive), Some(colon)) => (drive, colon),
        _ => return Err(invalid(path, "path is too short")),
    };
    if colon != ':' {
        return Err(invalid(
            path,
            "path does not have a colon (:) as its second character",
        ));
    }
    if !drive.is_ascii_alphabetic() {
        return Err(invalid(path, "path does not start with a drive letter"));
    }
    match chars.next() {
        None | Some('\\') => Ok(()),
        Some(_) => Err(invalid(
            path,
            "path does not have a backslash (\\) as its third character",
        )),
    }
}

/// The mapping whose prefix is the longest one `path` starts with, compared case-insensitively.
fn mapped_share<'m>(path: &str, mappings: &'m [(String, String)]) -> Option<(&'m str, usize)> {
    mappings
        .iter()
        .filter(|(prefix, _)| {
            let prefix = prefix.trim_end_matches('\\');
            path.len() >= prefix.len()
                && path.is_char_boundary(prefix.len())
                && path[..prefix.len()].eq_ignore_ascii_case(prefix)
                && matches!(path[prefix.len()..].chars().next(), None | Some('\\'))
        })
        .max_by_key(|(prefix, _)| prefix.trim_end_matches('\\').len())
        .map(|(prefix, share)| (share.as_str(), prefix.trim_end_matches('\\').len()))
}

/// Translate a Windows path on the remote host into an `smb://` URL.
///
/// The path is validated before anything else is done with it: it must consist of a drive
/// letter and a colon, optionally followed by a backslash and the rest of the path.
///
/// ```
/// use wintelnet::smb::{encode_smb_url, SmbTarget, DEFAULT_CIFS_PORT};
///
/// let target = SmbTarget {
///     username: "a b",
///     password: "p@ss",
///     address: "h",
///     port: DEFAULT_CIFS_PORT,
///     share_mappings: &[],
/// };
/// assert_eq!(
///     encode_smb_url(r"C:\foo\bar", &target).unwrap(),
///     "smb://a%20b:p%40ss@h/C$/foo/bar"
/// );
/// ```
pub fn encode_smb_url(path: &str, target: &SmbTarget<'_>) -> Result<String, Error> {
    validate(path)?;

    let mut url = String::from("smb://");
    url.push_str(&urlencoding::encode(&target.username.replacen('\\', ";", 1)));
    url.push(':');
    url.push_str(&urlencoding::encode(target.password));
    url.push('@');
    url.push_str(&urlencoding::encode(target.address));
    if target.port != DEFAULT_CIFS_PORT {
        url.push(':');
        url.push_str(&target.port.to_string());
    }
    url.push('/');

    let rest = match mapped_share(path, target.share_mappings) {
        Some((share, prefix_len)) => {
            url.push_str(share);
            url.push('/');
            &path[prefix_len..]
        }
        None => {
            url.push_str(&path[..1]);
            url.push_str("$/");
            &path[2..]
        }
    };
    url.push_str(&rest.trim_start_matches('\\').replace('\\', "/"));

    tracing::trace!("Encoded Windows host path {} to SMB URL", path);

    Ok(url)
}

/// Append `child` to the Windows path `parent`.
///
/// Forward slashes in `child` are taken as path separators.
pub fn join(parent: &str, child: &str) -> String {
    let mut path = String::with_capacity(parent.len() + child.len() + 1);
    path.push_str(parent);
    if !parent.ends_with('\\') {
        path.push('\\');
    }
    path.push_str(&child.replace('/', "\\"));
    path
}
