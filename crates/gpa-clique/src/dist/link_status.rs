use std::fmt;

use gpa::{GpaError, KeyPair, PublicKey, Signature, WireReader, WireWriter};

use super::SessionId;

/// Domain separation for link-status signatures.
const SIGNING_TAG: &[u8] = b"gpa-clique/link-status/v1";

const FLAG_OK: u8 = 0;
const FLAG_FAILED: u8 = 1;

/// Why a link is considered broken.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum LinkFailure {
    /// The observer does not trust the destination and never contacted it.
    #[error("non-trusted")]
    NonTrusted,
    /// No valid response arrived before the session deadline.
    #[error("timeout")]
    Timeout,
    /// Nobody reported anything about the link.
    #[error("unknown")]
    Unknown,
    /// Reason reported by a remote peer that this version does not know.
    #[error("{0}")]
    Other(String),
}

impl LinkFailure {
    /// Parse a wire reason. Well-known strings map to their variants.
    pub fn from_reason(reason: &str) -> Self {
        match reason {
            "non-trusted" => Self::NonTrusted,
            "timeout" => Self::Timeout,
            "unknown" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Signed statement "src observed dst as reachable / failed" within one
/// session.
///
/// A positive status is signed by `dst`: the responder attests that it got
/// the query from `src`. A failure is signed by `src`, the observer.
#[derive(Clone, PartialEq, Eq)]
pub struct LinkStatus {
    src: PublicKey,
    dst: PublicKey,
    failure: Option<LinkFailure>,
    signature: Signature,
}

impl LinkStatus {
    /// Positive status for `src -> me`, signed by me.
    pub fn ok(session: &SessionId, src: PublicKey, me: &KeyPair) -> Self {
        let dst = me.public_key();
        let signature = me.sign(&signing_bytes(session, &src, &dst, None));
        Self {
            src,
            dst,
            failure: None,
            signature,
        }
    }

    /// Failed status for `me -> dst`, signed by me.
    pub fn failed(session: &SessionId, me: &KeyPair, dst: PublicKey, reason: LinkFailure) -> Self {
        let src = me.public_key();
        let signature = me.sign(&signing_bytes(session, &src, &dst, Some(&reason)));
        Self {
            src,
            dst,
            failure: Some(reason),
            signature,
        }
    }

    pub fn src_pub_key(&self) -> &PublicKey {
        &self.src
    }

    pub fn dst_pub_key(&self) -> &PublicKey {
        &self.dst
    }

    pub fn failure(&self) -> Option<&LinkFailure> {
        self.failure.as_ref()
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    /// Check the signature against the party that must have made this
    /// statement.
    pub fn validate(&self, session: &SessionId) -> bool {
        let signer = match self.failure {
            None => &self.dst,
            Some(_) => &self.src,
        };
        let data = signing_bytes(session, &self.src, &self.dst, self.failure.as_ref());
        signer.verify(&data, &self.signature)
    }

    pub fn short_string(&self) -> String {
        match &self.failure {
            None => format!("{}->{}: ok", self.src.short_string(), self.dst.short_string()),
            Some(reason) => format!(
                "{}->{}: {reason}",
                self.src.short_string(),
                self.dst.short_string()
            ),
        }
    }

    pub(crate) fn write(&self, w: &mut WireWriter) -> Result<(), GpaError> {
        w.write_public_key(&self.src).write_public_key(&self.dst);
        match &self.failure {
            None => {
                w.write_u8(FLAG_OK);
            }
            Some(reason) => {
                w.write_u8(FLAG_FAILED)
                    .write_string("link_status.reason", &reason.to_string())?;
            }
        }
        w.write_signature(&self.signature);
        Ok(())
    }

    pub(crate) fn read(r: &mut WireReader<'_>) -> Result<Self, GpaError> {
        let src = r.read_public_key()?;
        let dst = r.read_public_key()?;
        let failure = match r.read_u8()? {
            FLAG_OK => None,
            FLAG_FAILED => Some(LinkFailure::from_reason(
                &r.read_string("link_status.reason")?,
            )),
            flag => {
                return Err(GpaError::InvalidField {
                    field: "link_status.flag",
                    reason: format!("unexpected value {flag}"),
                })
            }
        };
        let signature = r.read_signature()?;
        Ok(Self {
            src,
            dst,
            failure,
            signature,
        })
    }
}

impl fmt::Debug for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LinkStatus({})", self.short_string())
    }
}

fn signing_bytes(
    session: &SessionId,
    src: &PublicKey,
    dst: &PublicKey,
    failure: Option<&LinkFailure>,
) -> Vec<u8> {
    let mut data = Vec::with_capacity(SIGNING_TAG.len() + 32 * 3 + 16);
    data.extend_from_slice(SIGNING_TAG);
    data.extend_from_slice(session.as_bytes());
    data.extend_from_slice(src.as_bytes());
    data.extend_from_slice(dst.as_bytes());
    match failure {
        None => data.push(FLAG_OK),
        Some(reason) => {
            data.push(FLAG_FAILED);
            data.extend_from_slice(reason.to_string().as_bytes());
        }
    }
    data
}
