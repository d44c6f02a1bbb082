// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interleaved wire layout: headers and data in one transport batch.

use super::{decode_equipment_header, decode_stf_header, WireError};
use crate::data::{EquipmentHbFrames, StfVisitor, SubTimeFrame};
use crate::transport::{Channel, Message};

const BATCH_RESERVE: usize = 1024;

/// Serializes an STF into one interleaved batch and sends it.
pub struct InterleavedSerializer<'a, C: Channel + ?Sized> {
    chan: &'a C,
    messages: Vec<Message>,
}

impl<'a, C: Channel + ?Sized> InterleavedSerializer<'a, C> {
    pub fn new(chan: &'a C) -> Self {
        Self {
            chan,
            messages: Vec::with_capacity(BATCH_RESERVE),
        }
    }

    /// Consume the STF and send it as one batch. The source is left empty.
    pub fn serialize(&mut self, mut stf: SubTimeFrame) -> Result<(), WireError> {
        self.messages.clear();

        stf.accept(self)?;

        let batch = std::mem::replace(&mut self.messages, Vec::with_capacity(BATCH_RESERVE));
        self.chan.send(batch)?;
        Ok(())
    }
}

impl<C: Channel + ?Sized> StfVisitor for InterleavedSerializer<'_, C> {
    type Error = WireError;

    fn visit_equipment(&mut self, eq: &mut EquipmentHbFrames) -> Result<(), WireError> {
        debug_assert_eq!(eq.header.payload_size as usize, eq.frames.len());

        self.messages.push(Message::from_vec(eq.header.to_vec()));
        self.messages.append(&mut eq.frames);
        Ok(())
    }

    fn visit_stf(&mut self, stf: &mut SubTimeFrame) -> Result<(), WireError> {
        let header = stf.header.take().ok_or(WireError::EmptyStf)?;
        self.messages.push(Message::from_vec(header.to_vec()));

        for eq in stf.readout.values_mut() {
            eq.accept(self)?;
        }
        stf.readout.clear();
        Ok(())
    }
}

/// Rebuilds an STF from one interleaved batch.
#[derive(Default)]
pub struct InterleavedDeserializer {
    messages: std::vec::IntoIter<Message>,
}

impl InterleavedDeserializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_msg(&mut self) -> Result<Message, WireError> {
        self.messages.next().ok_or(WireError::Truncated { expected: 1 })
    }

    /// Receive one batch and rebuild the STF.
    pub fn deserialize<C: Channel + ?Sized>(&mut self, chan: &C) -> Result<SubTimeFrame, WireError> {
        let parts = chan.recv()?;
        self.deserialize_from_parts(parts)
    }

    /// Rebuild the STF from an already-received batch.
    ///
    /// The input must be consumed exactly; leftover messages are a framing
    /// error and no STF is produced.
    pub fn deserialize_from_parts(
        &mut self,
        parts: Vec<Message>,
    ) -> Result<SubTimeFrame, WireError> {
        self.messages = parts.into_iter();

        let mut stf = SubTimeFrame::empty();
        stf.accept(self)?;

        let residual = self.messages.len();
        if residual != 0 {
            self.messages = Vec::new().into_iter();
            return Err(WireError::Residual { count: residual });
        }
        Ok(stf)
    }
}

impl StfVisitor for InterleavedDeserializer {
    type Error = WireError;

    fn visit_equipment(&mut self, eq: &mut EquipmentHbFrames) -> Result<(), WireError> {
        let hdr_msg = self.next_msg()?;
        eq.header = decode_equipment_header(&hdr_msg)?;

        let count = eq.header.payload_size as usize;
        eq.frames.reserve(count);
        for _ in 0..count {
            eq.frames.push(self.next_msg()?);
        }
        Ok(())
    }

    fn visit_stf(&mut self, stf: &mut SubTimeFrame) -> Result<(), WireError> {
        let hdr_msg = self.next_msg()?;
        let header = decode_stf_header(&hdr_msg)?;
        let equipment_count = header.data.payload_size as usize;
        stf.header = Some(header);

        for _ in 0..equipment_count {
            let mut eq = EquipmentHbFrames::empty();
            eq.accept(self)?;
            stf.readout.insert(eq.equipment_identifier(), eq);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EquipmentIdentifier;
    use crate::headers::{DataDescription, DataOrigin};
    use crate::transport::MemChannel;

    fn sample_stf() -> SubTimeFrame {
        let mut stf = SubTimeFrame::new(0, 7);
        let eq_a = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 1);
        let eq_b = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 2);
        stf.add_hb_frame(eq_a, Message::from_vec(vec![0x01])).expect("add");
        stf.add_hb_frame(eq_a, Message::from_vec(vec![0x02, 0x02])).expect("add");
        stf.add_hb_frame(eq_b, Message::from_vec(vec![0x03; 3])).expect("add");
        stf
    }

    #[test]
    fn test_roundtrip_empty_stf() {
        let (a, b) = MemChannel::pair();
        let stf = SubTimeFrame::new(0, 42);

        InterleavedSerializer::new(&a).serialize(stf).expect("serialize");

        let got = InterleavedDeserializer::new().deserialize(&b).expect("deserialize");
        assert_eq!(got.id(), Some(42));
        assert_eq!(got.equipment_count(), 0);
    }

    #[test]
    fn test_roundtrip_preserves_frames() {
        let (a, b) = MemChannel::pair();

        InterleavedSerializer::new(&a)
            .serialize(sample_stf())
            .expect("serialize");

        let got = InterleavedDeserializer::new().deserialize(&b).expect("deserialize");
        assert_eq!(got.id(), Some(7));
        assert_eq!(got.equipment_count(), 2);
        assert_eq!(got.data_size(), 6);

        let eq_a = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 1);
        let frames = got.equipment(&eq_a).expect("present").frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data(), &[0x01]);
        assert_eq!(frames[1].data(), &[0x02, 0x02]);
    }

    #[test]
    fn test_batch_layout() {
        let (a, b) = MemChannel::pair();
        InterleavedSerializer::new(&a)
            .serialize(sample_stf())
            .expect("serialize");

        // stf hdr + (eq hdr + 2 frames) + (eq hdr + 1 frame)
        let parts = b.recv().expect("recv");
        assert_eq!(parts.len(), 6);
    }

    #[test]
    fn test_serialize_leaves_source_empty() {
        let (a, _b) = MemChannel::pair();
        let mut ser = InterleavedSerializer::new(&a);

        let mut stf = sample_stf();
        // consume through the visitor without the channel send
        stf.accept(&mut ser).expect("visit");
        assert!(!stf.is_populated());
        assert_eq!(stf.equipment_count(), 0);
    }

    #[test]
    fn test_truncated_batch_is_framing_error() {
        let (a, b) = MemChannel::pair();
        InterleavedSerializer::new(&a)
            .serialize(sample_stf())
            .expect("serialize");

        let mut parts = b.recv().expect("recv");
        parts.pop();

        let res = InterleavedDeserializer::new().deserialize_from_parts(parts);
        assert!(matches!(res, Err(WireError::Truncated { .. })));
    }

    #[test]
    fn test_residual_messages_are_framing_error() {
        let (a, b) = MemChannel::pair();
        InterleavedSerializer::new(&a)
            .serialize(sample_stf())
            .expect("serialize");

        let mut parts = b.recv().expect("recv");
        parts.push(Message::alloc(4));

        let res = InterleavedDeserializer::new().deserialize_from_parts(parts);
        assert!(matches!(res, Err(WireError::Residual { count: 1 })));
    }

    #[test]
    fn test_serialize_empty_shell_fails() {
        let (a, _b) = MemChannel::pair();
        let res = InterleavedSerializer::new(&a).serialize(SubTimeFrame::default());
        assert!(matches!(res, Err(WireError::EmptyStf)));
    }
}
