// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SubTimeFrame data model.
//!
//! A [`SubTimeFrame`] groups HB frame messages by [`EquipmentIdentifier`]
//! under one time-frame id. The readout map is ordered; every consumer that
//! walks an STF (serializers, file writer, adapter) observes equipments in
//! identifier order, so serialization order and on-disk order are fixed by
//! the container, never by the visitor.
//!
//! STFs are move-only: exactly one pipeline stage owns an STF at any moment.
//! Serializers and the adapter consume the STF they are given and leave it
//! empty (header released, readout cleared); public mutations reject the
//! empty state with [`StfError::Empty`].

use crate::headers::{DataDescription, DataHeader, DataOrigin, StfHeader};
use crate::readout::ReadoutStfHeader;
use crate::transport::Message;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Time frame identifier.
pub type StfId = u64;

/// Data model errors.
#[derive(Debug, Error)]
pub enum StfError {
    #[error("operation on an empty (moved-from) SubTimeFrame")]
    Empty,

    #[error("cannot merge: id mismatch (this: {this}, other: {other})")]
    IdMismatch { this: StfId, other: StfId },
}

/// Value triple uniquely naming a readout source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EquipmentIdentifier {
    pub data_description: DataDescription,
    pub data_origin: DataOrigin,
    pub sub_specification: u64,
}

impl EquipmentIdentifier {
    pub fn new(
        data_description: DataDescription,
        data_origin: DataOrigin,
        sub_specification: u64,
    ) -> Self {
        Self {
            data_description,
            data_origin,
            sub_specification,
        }
    }
}

impl From<&DataHeader> for EquipmentIdentifier {
    fn from(hdr: &DataHeader) -> Self {
        Self {
            data_description: hdr.data_description,
            data_origin: hdr.data_origin,
            sub_specification: hdr.sub_specification,
        }
    }
}

// Total order: (description, sub_specification, origin).
impl Ord for EquipmentIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.data_description
            .cmp(&other.data_description)
            .then(self.sub_specification.cmp(&other.sub_specification))
            .then(self.data_origin.cmp(&other.data_origin))
    }
}

impl PartialOrd for EquipmentIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for EquipmentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.data_description, self.data_origin, self.sub_specification
        )
    }
}

/// Ordered HB frames of one equipment, with their equipment header.
///
/// `header.payload_size` always equals `frames.len()`.
#[derive(Debug)]
pub struct EquipmentHbFrames {
    pub(crate) header: DataHeader,
    pub(crate) frames: Vec<Message>,
}

impl EquipmentHbFrames {
    pub fn new(id: &EquipmentIdentifier) -> Self {
        Self {
            header: DataHeader::new(
                id.data_description,
                id.data_origin,
                id.sub_specification,
                0,
            ),
            frames: Vec::new(),
        }
    }

    /// Placeholder for deserializers; header is replaced before use.
    pub(crate) fn empty() -> Self {
        Self::new(&EquipmentIdentifier::new(
            DataDescription::ANY,
            DataOrigin::ANY,
            0,
        ))
    }

    pub fn add_hb_frame(&mut self, frame: Message) {
        self.frames.push(frame);
        self.header.payload_size = self.frames.len() as u64;
    }

    pub fn add_hb_frames(&mut self, frames: Vec<Message>) {
        self.frames.extend(frames);
        self.header.payload_size = self.frames.len() as u64;
    }

    /// Total payload bytes across all frames.
    pub fn data_size(&self) -> u64 {
        self.frames.iter().map(|f| f.len() as u64).sum()
    }

    pub fn equipment_identifier(&self) -> EquipmentIdentifier {
        EquipmentIdentifier::from(&self.header)
    }

    pub fn header(&self) -> &DataHeader {
        &self.header
    }

    pub fn frames(&self) -> &[Message] {
        &self.frames
    }

    pub fn accept<V: StfVisitor>(&mut self, v: &mut V) -> Result<(), V::Error> {
        v.visit_equipment(self)
    }

    pub fn accept_const<'a, V: StfConstVisitor<'a>>(&'a self, v: &mut V) {
        v.visit_equipment(self);
    }
}

/// All HB frames of one builder node for one time-frame interval.
#[derive(Debug, Default)]
pub struct SubTimeFrame {
    pub(crate) header: Option<StfHeader>,
    pub(crate) readout: BTreeMap<EquipmentIdentifier, EquipmentHbFrames>,
    channel_id: u32,
}

impl SubTimeFrame {
    /// Create a populated STF for the given channel and id.
    pub fn new(channel_id: u32, stf_id: StfId) -> Self {
        Self {
            header: Some(StfHeader::new(stf_id)),
            readout: BTreeMap::new(),
            channel_id,
        }
    }

    /// Empty shell for deserializers.
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub fn is_populated(&self) -> bool {
        self.header.is_some()
    }

    pub fn id(&self) -> Option<StfId> {
        self.header.as_ref().map(|h| h.stf_id)
    }

    pub fn header(&self) -> Option<&StfHeader> {
        self.header.as_ref()
    }

    /// Channel used to allocate header messages (transport ownership hint).
    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    pub fn equipment_count(&self) -> usize {
        self.readout.len()
    }

    /// Append one HB frame, creating the equipment entry if absent.
    pub fn add_hb_frame(
        &mut self,
        id: EquipmentIdentifier,
        frame: Message,
    ) -> Result<(), StfError> {
        let header = self.header.as_mut().ok_or(StfError::Empty)?;

        self.readout
            .entry(id)
            .or_insert_with(|| EquipmentHbFrames::new(&id))
            .add_hb_frame(frame);

        header.data.payload_size = self.readout.len() as u64;
        Ok(())
    }

    /// Bulk input path from raw readout: the equipment is derived from the
    /// update header's link id.
    pub fn add_hb_frames(
        &mut self,
        readout_hdr: &ReadoutStfHeader,
        frames: Vec<Message>,
    ) -> Result<(), StfError> {
        let header = self.header.as_mut().ok_or(StfError::Empty)?;

        let id = EquipmentIdentifier::new(
            DataDescription::CRU_DATA,
            DataOrigin::CRU,
            u64::from(readout_hdr.link_id),
        );

        self.readout
            .entry(id)
            .or_insert_with(|| EquipmentHbFrames::new(&id))
            .add_hb_frames(frames);

        header.data.payload_size = self.readout.len() as u64;
        Ok(())
    }

    /// Adopt all equipment data of another STF with the same id.
    ///
    /// A duplicate equipment keeps the already-present entry; the incoming
    /// one is dropped (first duplicate warns, the rest log at debug).
    pub fn merge(&mut self, other: SubTimeFrame) -> Result<(), StfError> {
        let this_id = self.id().ok_or(StfError::Empty)?;
        let other_id = other.id().ok_or(StfError::Empty)?;
        if this_id != other_id {
            return Err(StfError::IdMismatch {
                this: this_id,
                other: other_id,
            });
        }

        let mut warned = false;
        for (id, frames) in other.readout {
            if self.readout.contains_key(&id) {
                if !warned {
                    warn!(stf_id = this_id, equipment = %id, "equipment already present, dropping duplicate");
                    warned = true;
                } else {
                    debug!(stf_id = this_id, equipment = %id, "dropping duplicate equipment");
                }
                continue;
            }
            self.readout.insert(id, frames);
        }

        if let Some(header) = self.header.as_mut() {
            header.data.payload_size = self.readout.len() as u64;
        }
        Ok(())
    }

    /// Move all equipments of one origin into a new STF with the same id.
    pub fn split_by_origin(&mut self, origin: DataOrigin) -> Result<SubTimeFrame, StfError> {
        let id = self.id().ok_or(StfError::Empty)?;

        let mut split = SubTimeFrame::new(self.channel_id, id);
        let keys: Vec<EquipmentIdentifier> = self
            .readout
            .keys()
            .filter(|k| k.data_origin == origin)
            .copied()
            .collect();

        for key in keys {
            if let Some(frames) = self.readout.remove(&key) {
                split.readout.insert(key, frames);
            }
        }

        if let Some(header) = self.header.as_mut() {
            header.data.payload_size = self.readout.len() as u64;
        }
        if let Some(header) = split.header.as_mut() {
            header.data.payload_size = split.readout.len() as u64;
        }
        Ok(split)
    }

    /// Total payload bytes across all equipments. O(total frames).
    pub fn data_size(&self) -> u64 {
        self.readout.values().map(|e| e.data_size()).sum()
    }

    /// Equipment identifiers in sort order.
    pub fn equipment_identifiers(&self) -> Vec<EquipmentIdentifier> {
        self.readout.keys().copied().collect()
    }

    pub fn equipment(&self, id: &EquipmentIdentifier) -> Option<&EquipmentHbFrames> {
        self.readout.get(id)
    }

    pub fn accept<V: StfVisitor>(&mut self, v: &mut V) -> Result<(), V::Error> {
        v.visit_stf(self)
    }

    pub fn accept_const<'a, V: StfConstVisitor<'a>>(&'a self, v: &mut V) {
        v.visit_stf(self);
    }
}

/// Mutating visitor over the STF hierarchy.
///
/// Used by consumers that move data out of the STF (serializers, adapter).
/// Iteration order of equipments inside `visit_stf` implementations must
/// come from the container map, which is ordered by identifier.
pub trait StfVisitor {
    type Error;

    fn visit_equipment(&mut self, frames: &mut EquipmentHbFrames) -> Result<(), Self::Error>;
    fn visit_stf(&mut self, stf: &mut SubTimeFrame) -> Result<(), Self::Error>;
}

/// Read-only visitor over the STF hierarchy (file writer).
pub trait StfConstVisitor<'a> {
    fn visit_equipment(&mut self, frames: &'a EquipmentHbFrames);
    fn visit_stf(&mut self, stf: &'a SubTimeFrame);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cru_equipment(link: u64) -> EquipmentIdentifier {
        EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, link)
    }

    #[test]
    fn test_payload_size_tracks_equipment_count() {
        let mut stf = SubTimeFrame::new(0, 1);
        stf.add_hb_frame(cru_equipment(1), Message::alloc(8))
            .expect("add");
        stf.add_hb_frame(cru_equipment(1), Message::alloc(8))
            .expect("add");
        stf.add_hb_frame(cru_equipment(2), Message::alloc(8))
            .expect("add");

        let header = stf.header().expect("populated");
        assert_eq!(header.data.payload_size, 2);

        let eq = stf.equipment(&cru_equipment(1)).expect("present");
        assert_eq!(eq.header().payload_size, 2);
        assert_eq!(eq.frames().len(), 2);
    }

    #[test]
    fn test_add_hb_frames_derives_cru_equipment() {
        let mut stf = SubTimeFrame::new(0, 5);
        let hdr = ReadoutStfHeader {
            stf_id: 5,
            hb_frame_count: 2,
            link_id: 12,
        };
        stf.add_hb_frames(&hdr, vec![Message::alloc(4), Message::alloc(4)])
            .expect("add");

        let ids = stf.equipment_identifiers();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0], cru_equipment(12));
        assert_eq!(stf.data_size(), 8);
    }

    #[test]
    fn test_empty_stf_rejects_mutation() {
        let mut stf = SubTimeFrame::empty();
        let res = stf.add_hb_frame(cru_equipment(0), Message::alloc(1));
        assert!(matches!(res, Err(StfError::Empty)));
    }

    #[test]
    fn test_equipment_identifier_ordering() {
        // order on (description, sub_specification, origin)
        let a = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::FLP, 1);
        let b = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 2);
        let c = EquipmentIdentifier::new(DataDescription::RAW_DATA, DataOrigin::CRU, 0);

        assert!(a < b, "sub_specification decides before origin");
        assert!(b < c, "description decides first");

        let mut stf = SubTimeFrame::new(0, 1);
        stf.add_hb_frame(c, Message::alloc(1)).expect("add");
        stf.add_hb_frame(a, Message::alloc(1)).expect("add");
        stf.add_hb_frame(b, Message::alloc(1)).expect("add");
        assert_eq!(stf.equipment_identifiers(), vec![a, b, c]);
    }

    #[test]
    fn test_merge_same_id() {
        let mut left = SubTimeFrame::new(0, 3);
        left.add_hb_frame(cru_equipment(1), Message::alloc(2))
            .expect("add");

        let mut right = SubTimeFrame::new(0, 3);
        right
            .add_hb_frame(cru_equipment(2), Message::alloc(4))
            .expect("add");

        left.merge(right).expect("merge");
        assert_eq!(left.equipment_count(), 2);
        assert_eq!(left.header().expect("populated").data.payload_size, 2);
        assert_eq!(left.data_size(), 6);
    }

    #[test]
    fn test_merge_id_mismatch() {
        let mut left = SubTimeFrame::new(0, 3);
        let right = SubTimeFrame::new(0, 4);
        assert!(matches!(
            left.merge(right),
            Err(StfError::IdMismatch { this: 3, other: 4 })
        ));
    }

    #[test]
    fn test_merge_duplicate_keeps_first() {
        let mut left = SubTimeFrame::new(0, 3);
        left.add_hb_frame(cru_equipment(1), Message::from_vec(vec![0xaa]))
            .expect("add");

        let mut right = SubTimeFrame::new(0, 3);
        right
            .add_hb_frame(cru_equipment(1), Message::from_vec(vec![0xbb]))
            .expect("add");
        right
            .add_hb_frame(cru_equipment(1), Message::from_vec(vec![0xcc]))
            .expect("add");

        left.merge(right).expect("merge");
        assert_eq!(left.equipment_count(), 1);

        let eq = left.equipment(&cru_equipment(1)).expect("present");
        assert_eq!(eq.frames().len(), 1);
        assert_eq!(eq.frames()[0].data(), &[0xaa]);
    }

    #[test]
    fn test_split_by_origin() {
        let tpc = EquipmentIdentifier::new(DataDescription::RAW_DATA, DataOrigin::TPC, 0);
        let its = EquipmentIdentifier::new(DataDescription::RAW_DATA, DataOrigin::ITS, 0);

        let mut stf = SubTimeFrame::new(0, 8);
        stf.add_hb_frame(tpc, Message::alloc(10)).expect("add");
        stf.add_hb_frame(its, Message::alloc(20)).expect("add");

        let tpc_stf = stf.split_by_origin(DataOrigin::TPC).expect("split");
        assert_eq!(tpc_stf.id(), Some(8));
        assert_eq!(tpc_stf.equipment_identifiers(), vec![tpc]);
        assert_eq!(tpc_stf.header().expect("populated").data.payload_size, 1);

        assert_eq!(stf.equipment_identifiers(), vec![its]);
        assert_eq!(stf.header().expect("populated").data.payload_size, 1);
    }
}
