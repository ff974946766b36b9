//! Security tokens: immutable, reference-counted credential bundles
//! (spec §3).

/// Privilege bit granting kernel-level access to operations otherwise
/// restricted to a matching identity (e.g. signalling another process).
pub const PRIV_KERNEL: u32 = 1 << 0;

/// An immutable credential: a user/group context and a privilege bitmap.
/// Always held by reference count (`Arc<Token>`); threads and processes each
/// carry one, and a thread's own token overrides its process's while set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub uid: u32,
    pub gid: u32,
    pub privileges: u32,
}

impl Token {
    pub const fn new(uid: u32, gid: u32, privileges: u32) -> Self {
        Token {
            uid,
            gid,
            privileges,
        }
    }

    pub fn has_privilege(&self, bit: u32) -> bool {
        self.privileges & bit == bit
    }

    pub fn is_kernel(&self) -> bool {
        self.has_privilege(PRIV_KERNEL)
    }
}
