// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Split wire layout: one headers batch, one data batch.
//!
//! An STF with zero equipments sends only the headers batch; the receiver
//! infers the missing data batch from the headers batch size.

use super::{decode_equipment_header, decode_stf_header, WireError};
use crate::data::{EquipmentHbFrames, StfVisitor, SubTimeFrame};
use crate::transport::{Channel, Message};

const BATCH_RESERVE: usize = 1024;

/// Serializes an STF into a headers batch plus a data batch.
pub struct SplitSerializer<'a, C: Channel + ?Sized> {
    chan: &'a C,
    header_messages: Vec<Message>,
    data_messages: Vec<Message>,
}

impl<'a, C: Channel + ?Sized> SplitSerializer<'a, C> {
    pub fn new(chan: &'a C) -> Self {
        Self {
            chan,
            header_messages: Vec::with_capacity(BATCH_RESERVE),
            data_messages: Vec::with_capacity(BATCH_RESERVE),
        }
    }

    /// Consume the STF and send it as one or two batches.
    pub fn serialize(&mut self, mut stf: SubTimeFrame) -> Result<(), WireError> {
        self.header_messages.clear();
        self.data_messages.clear();

        stf.accept(self)?;

        let send_data = self.header_messages.len() > 1;

        let headers =
            std::mem::replace(&mut self.header_messages, Vec::with_capacity(BATCH_RESERVE));
        self.chan.send(headers)?;

        if send_data {
            let data =
                std::mem::replace(&mut self.data_messages, Vec::with_capacity(BATCH_RESERVE));
            self.chan.send(data)?;
        }
        Ok(())
    }
}

impl<C: Channel + ?Sized> StfVisitor for SplitSerializer<'_, C> {
    type Error = WireError;

    fn visit_equipment(&mut self, eq: &mut EquipmentHbFrames) -> Result<(), WireError> {
        debug_assert_eq!(eq.header.payload_size as usize, eq.frames.len());

        self.header_messages.push(Message::from_vec(eq.header.to_vec()));
        self.data_messages.append(&mut eq.frames);
        Ok(())
    }

    fn visit_stf(&mut self, stf: &mut SubTimeFrame) -> Result<(), WireError> {
        let header = stf.header.take().ok_or(WireError::EmptyStf)?;
        debug_assert_eq!(header.data.payload_size as usize, stf.readout.len());
        self.header_messages.push(Message::from_vec(header.to_vec()));

        for eq in stf.readout.values_mut() {
            eq.accept(self)?;
        }
        stf.readout.clear();
        Ok(())
    }
}

/// Rebuilds an STF from a headers batch plus a data batch.
#[derive(Default)]
pub struct SplitDeserializer {
    headers: std::vec::IntoIter<Message>,
    data: std::vec::IntoIter<Message>,
}

impl SplitDeserializer {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_header(&mut self) -> Result<Message, WireError> {
        self.headers.next().ok_or(WireError::Truncated { expected: 1 })
    }

    fn next_data(&mut self) -> Result<Message, WireError> {
        self.data.next().ok_or(WireError::Truncated { expected: 1 })
    }

    /// Receive the batches and rebuild the STF. The data batch is only
    /// received when the headers batch announces equipments.
    pub fn deserialize<C: Channel + ?Sized>(&mut self, chan: &C) -> Result<SubTimeFrame, WireError> {
        let headers = chan.recv()?;
        let data = if headers.len() > 1 {
            chan.recv()?
        } else {
            Vec::new()
        };
        self.deserialize_from_batches(headers, data)
    }

    /// Rebuild the STF from already-received batches.
    pub fn deserialize_from_batches(
        &mut self,
        headers: Vec<Message>,
        data: Vec<Message>,
    ) -> Result<SubTimeFrame, WireError> {
        self.headers = headers.into_iter();
        self.data = data.into_iter();

        let mut stf = SubTimeFrame::empty();
        stf.accept(self)?;

        let residual = self.headers.len() + self.data.len();
        if residual != 0 {
            self.headers = Vec::new().into_iter();
            self.data = Vec::new().into_iter();
            return Err(WireError::Residual { count: residual });
        }
        Ok(stf)
    }
}

impl StfVisitor for SplitDeserializer {
    type Error = WireError;

    fn visit_equipment(&mut self, eq: &mut EquipmentHbFrames) -> Result<(), WireError> {
        let hdr_msg = self.next_header()?;
        eq.header = decode_equipment_header(&hdr_msg)?;

        let count = eq.header.payload_size as usize;
        eq.frames.reserve(count);
        for _ in 0..count {
            eq.frames.push(self.next_data()?);
        }
        Ok(())
    }

    fn visit_stf(&mut self, stf: &mut SubTimeFrame) -> Result<(), WireError> {
        let hdr_msg = self.next_header()?;
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

    #[test]
    fn test_single_equipment_three_frames() {
        let (a, b) = MemChannel::pair();

        let eq = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 7);
        let mut stf = SubTimeFrame::new(0, 11);
        stf.add_hb_frame(eq, Message::from_vec(vec![0x01])).expect("add");
        stf.add_hb_frame(eq, Message::from_vec(vec![0x02, 0x02])).expect("add");
        stf.add_hb_frame(eq, Message::from_vec(vec![0x03, 0x03, 0x03])).expect("add");

        SplitSerializer::new(&a).serialize(stf).expect("serialize");

        // headers batch: stf hdr + 1 equipment hdr; data batch: 3 frames
        let headers = b.recv().expect("headers batch");
        let data = b.recv().expect("data batch");
        assert_eq!(headers.len(), 2);
        assert_eq!(data.len(), 3);

        let got = SplitDeserializer::new()
            .deserialize_from_batches(headers, data)
            .expect("deserialize");
        assert_eq!(got.id(), Some(11));
        assert_eq!(got.equipment_count(), 1);

        let frames = got.equipment(&eq).expect("present").frames();
        assert_eq!(frames[0].data(), &[0x01]);
        assert_eq!(frames[1].data(), &[0x02, 0x02]);
        assert_eq!(frames[2].data(), &[0x03, 0x03, 0x03]);
    }

    #[test]
    fn test_empty_stf_sends_headers_batch_only() {
        let (a, b) = MemChannel::pair();

        SplitSerializer::new(&a)
            .serialize(SubTimeFrame::new(0, 42))
            .expect("serialize");

        let got = SplitDeserializer::new().deserialize(&b).expect("deserialize");
        assert_eq!(got.id(), Some(42));
        assert_eq!(got.equipment_count(), 0);

        // nothing else was sent
        drop(a);
        assert!(b.recv().is_err());
    }

    #[test]
    fn test_missing_data_messages_are_framing_error() {
        let (a, b) = MemChannel::pair();

        let eq = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 1);
        let mut stf = SubTimeFrame::new(0, 1);
        stf.add_hb_frame(eq, Message::alloc(4)).expect("add");
        stf.add_hb_frame(eq, Message::alloc(4)).expect("add");

        SplitSerializer::new(&a).serialize(stf).expect("serialize");

        let headers = b.recv().expect("headers");
        let mut data = b.recv().expect("data");
        data.pop();

        let res = SplitDeserializer::new().deserialize_from_batches(headers, data);
        assert!(matches!(res, Err(WireError::Truncated { .. })));
    }

    #[test]
    fn test_residual_header_is_framing_error() {
        let (a, b) = MemChannel::pair();

        let eq = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 1);
        let mut stf = SubTimeFrame::new(0, 1);
        stf.add_hb_frame(eq, Message::alloc(4)).expect("add");

        SplitSerializer::new(&a).serialize(stf).expect("serialize");

        let mut headers = b.recv().expect("headers");
        let data = b.recv().expect("data");
        // duplicate an equipment header at the tail
        headers.push(Message::from_vec(headers[1].data().to_vec()));

        let res = SplitDeserializer::new().deserialize_from_batches(headers, data);
        assert!(matches!(res, Err(WireError::Residual { count: 1 })));
    }

    #[test]
    fn test_equipment_order_is_identifier_order() {
        let (a, b) = MemChannel::pair();

        let eq_hi = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 9);
        let eq_lo = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 2);

        let mut stf = SubTimeFrame::new(0, 5);
        // insertion order high then low; wire order must be low then high
        stf.add_hb_frame(eq_hi, Message::alloc(1)).expect("add");
        stf.add_hb_frame(eq_lo, Message::alloc(1)).expect("add");

        SplitSerializer::new(&a).serialize(stf).expect("serialize");

        let headers = b.recv().expect("headers");
        let first = decode_equipment_header(&headers[1]).expect("decode");
        let second = decode_equipment_header(&headers[2]).expect("decode");
        assert_eq!(first.sub_specification, 2);
        assert_eq!(second.sub_specification, 9);
    }
}
