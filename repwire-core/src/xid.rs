use serde::{Deserialize, Serialize};

const MAX_GTRID_LEN: usize = 64;
const MAX_BQUAL_LEN: usize = 64;
const MAX_DATA_LEN: usize = 128;

/// External (XA) transaction identifier: `format_id == -1` denotes null,
/// matching `wsrep::xid`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Xid {
    format_id: i64,
    gtrid_len: usize,
    bqual_len: usize,
    data: Vec<u8>,
}

impl Xid {
    pub fn null() -> Self {
        Xid {
            format_id: -1,
            gtrid_len: 0,
            bqual_len: 0,
            data: Vec::new(),
        }
    }

    pub fn new(
        format_id: i64,
        gtrid_len: usize,
        bqual_len: usize,
        data: &[u8],
    ) -> Result<Self, repwire_base::Error> {
        if gtrid_len > MAX_GTRID_LEN || bqual_len > MAX_BQUAL_LEN {
            return Err(repwire_base::err("maximum xid size exceeded"));
        }
        let len = gtrid_len + bqual_len;
        if len > MAX_DATA_LEN {
            return Err(repwire_base::err("maximum xid size exceeded"));
        }
        Ok(Xid {
            format_id,
            gtrid_len,
            bqual_len,
            data: data[..len.min(data.len())].to_vec(),
        })
    }

    pub fn is_null(&self) -> bool {
        self.format_id == -1
    }

    pub fn clear(&mut self) {
        *self = Xid::null();
    }

    pub fn format_id(&self) -> i64 {
        self.format_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Default for Xid {
    fn default() -> Self {
        Self::null()
    }
}

#[cfg(test)]
#[path = "test/xid.rs"]
mod test;
