//! Id generation for collections and fields.

use uuid::Uuid;

pub const COLLECTION_ID_LEN: usize = 15;
pub const FIELD_ID_LEN: usize = 8;

/// Random lowercase alphanumeric id of `len` characters (at most 32).
pub fn random_id(len: usize) -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(len);
    id
}

/// Generate an id of `len` characters for which `taken` returns false.
///
/// `taken` must cover both live and retired ids so nothing is ever recycled.
pub fn generate_unique<F>(len: usize, mut taken: F) -> crate::Result<String>
where
    F: FnMut(&str) -> crate::Result<bool>,
{
    loop {
        let id = random_id(len);
        if !taken(&id)? {
            return Ok(id);
        }
    }
}
