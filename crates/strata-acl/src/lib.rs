//! CDMI access control for the Strata archive.
//!
//! An access control list maps an identifier (a group id, `AUTHENTICATED@`
//! or `ANONYMOUS@`) to a single [`Ace`]. Each ACE carries an integer mask
//! whose bits follow the CDMI standard. Because bit `0x40` means
//! `DELETE_OBJECT` on a data object but `DELETE_SUBCONTAINER` on a
//! container, every conversion takes a [`MaskDomain`].
//!
//! # Conversions
//!
//! - [`level_to_mask`] / [`mask_to_level`]: coarse [`AccessLevel`] <-> mask
//! - [`acemask_to_cdmi`] / [`cdmi_to_acemask`]: mask <-> `"READ_OBJECT, ..."`
//! - [`aceflag_to_cdmi`] / [`cdmi_to_aceflag`]: flags <-> `"OBJECT_INHERIT, ..."`
//!
//! The symbolic tables are tested from the highest bit to the lowest and
//! that order is part of the wire format.

pub mod ace;
pub mod codec;
pub mod error;

pub use ace::{default_acl, Ace, AceType, Acl, ANONYMOUS, AUTHENTICATED};
pub use codec::{
    aceflag_to_cdmi, acemask_to_cdmi, cdmi_to_aceflag, cdmi_to_acemask, level_to_mask,
    mask_to_level, AccessLevel, MaskDomain,
};
pub use error::{AclError, AclResult};
