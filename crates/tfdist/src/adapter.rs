// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Downstream framework adapter.
//!
//! Flattens an STF into parallel `(header stack, payload)` pairs the
//! processing framework consumes. For HB frame `j` of equipment `e` the
//! stack is:
//!
//! ```text
//! [ DataHeader(e.description, e.origin, e.sub_spec, payload_len)
//! | HbFrameHeader(j)
//! | ProcessingHeader(timeslice) ]
//! ```
//!
//! The timeslice id is seeded with `start_time` and advances by `step` per
//! emitted pair. Equipments flatten in identifier order; the source STF is
//! emptied by the adaptation.

use crate::data::{EquipmentHbFrames, StfError, StfVisitor, SubTimeFrame};
use crate::headers::{DataHeader, HbFrameHeader, HeaderStack, ProcessingHeader};
use crate::transport::Message;

/// Flattens STFs for the downstream processing framework.
pub struct FrameworkAdapter {
    timeslice: u64,
    step: u64,
    out: Vec<(HeaderStack, Message)>,
}

impl FrameworkAdapter {
    pub fn new(start_time: u64, step: u64) -> Self {
        Self {
            timeslice: start_time,
            step,
            out: Vec::new(),
        }
    }

    /// Current timeslice id (the one the next pair will carry).
    pub fn timeslice(&self) -> u64 {
        self.timeslice
    }

    /// Consume the STF into `(header stack, payload)` pairs.
    pub fn adapt(
        &mut self,
        mut stf: SubTimeFrame,
    ) -> Result<Vec<(HeaderStack, Message)>, StfError> {
        stf.accept(self)?;
        Ok(std::mem::take(&mut self.out))
    }
}

impl StfVisitor for FrameworkAdapter {
    type Error = StfError;

    fn visit_equipment(&mut self, eq: &mut EquipmentHbFrames) -> Result<(), StfError> {
        let id = eq.equipment_identifier();

        for (j, frame) in eq.frames.drain(..).enumerate() {
            let mut stack = HeaderStack::new();
            stack.push_record(
                DataHeader::new(
                    id.data_description,
                    id.data_origin,
                    id.sub_specification,
                    frame.len() as u64,
                )
                .to_vec(),
            );

            let mut hb = Vec::with_capacity(HbFrameHeader::SIZE);
            let _ = HbFrameHeader::new(j as u32).write(&mut hb);
            stack.push_record(hb);

            let mut proc = Vec::with_capacity(ProcessingHeader::SIZE);
            let _ = ProcessingHeader::new(self.timeslice).write(&mut proc);
            stack.push_record(proc);
            self.timeslice = self.timeslice.wrapping_add(self.step);

            self.out.push((stack, frame));
        }
        Ok(())
    }

    fn visit_stf(&mut self, stf: &mut SubTimeFrame) -> Result<(), StfError> {
        stf.header.take().ok_or(StfError::Empty)?;

        for eq in stf.readout.values_mut() {
            eq.accept(self)?;
        }
        stf.readout.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::EquipmentIdentifier;
    use crate::headers::{header_type, DataDescription, DataOrigin};
    use std::io::Cursor;

    fn sample_stf() -> SubTimeFrame {
        let eq_a = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 1);
        let eq_b = EquipmentIdentifier::new(DataDescription::CRU_DATA, DataOrigin::CRU, 4);

        let mut stf = SubTimeFrame::new(0, 20);
        stf.add_hb_frame(eq_b, Message::from_vec(vec![0xb0; 8])).expect("add");
        stf.add_hb_frame(eq_a, Message::from_vec(vec![0xa0; 4])).expect("add");
        stf.add_hb_frame(eq_a, Message::from_vec(vec![0xa1; 6])).expect("add");
        stf
    }

    fn decode_stack(stack: &HeaderStack) -> (DataHeader, HbFrameHeader, ProcessingHeader) {
        let records: Vec<_> = stack.walk().collect::<Result<_, _>>().expect("walk");
        assert_eq!(records.len(), 3);

        let data = DataHeader::from_slice(records[0].1).expect("data header");
        let hb = HbFrameHeader::read(&mut Cursor::new(records[1].1)).expect("hb header");
        let proc = ProcessingHeader::read(&mut Cursor::new(records[2].1)).expect("proc header");
        (data, hb, proc)
    }

    #[test]
    fn test_adapt_flattens_in_identifier_order() {
        let mut adapter = FrameworkAdapter::new(100, 2);
        let pairs = adapter.adapt(sample_stf()).expect("adapt");
        assert_eq!(pairs.len(), 3);

        // equipment sub_spec 1 (two frames) precedes sub_spec 4
        let (d0, h0, p0) = decode_stack(&pairs[0].0);
        assert_eq!(d0.sub_specification, 1);
        assert_eq!(h0.hb_frame_id, 0);
        assert_eq!(p0.start_time, 100);
        assert_eq!(d0.payload_size, 4);
        assert_eq!(pairs[0].1.data(), &[0xa0; 4]);

        let (d1, h1, p1) = decode_stack(&pairs[1].0);
        assert_eq!(d1.sub_specification, 1);
        assert_eq!(h1.hb_frame_id, 1);
        assert_eq!(p1.start_time, 102);
        assert_eq!(pairs[1].1.data(), &[0xa1; 6]);

        let (d2, h2, p2) = decode_stack(&pairs[2].0);
        assert_eq!(d2.sub_specification, 4);
        assert_eq!(h2.hb_frame_id, 0);
        assert_eq!(p2.start_time, 104);
        assert_eq!(pairs[2].1.data(), &[0xb0; 8]);
    }

    #[test]
    fn test_timeslice_continues_across_stfs() {
        let mut adapter = FrameworkAdapter::new(0, 1);
        adapter.adapt(sample_stf()).expect("first");
        assert_eq!(adapter.timeslice(), 3);

        adapter.adapt(sample_stf()).expect("second");
        assert_eq!(adapter.timeslice(), 6);
    }

    #[test]
    fn test_stack_record_chain() {
        let mut adapter = FrameworkAdapter::new(0, 1);
        let pairs = adapter.adapt(sample_stf()).expect("adapt");

        let records: Vec<_> = pairs[0].0.walk().collect::<Result<_, _>>().expect("walk");
        assert!(records[0].0.has_next());
        assert!(records[1].0.has_next());
        assert!(!records[2].0.has_next());
        assert_eq!(records[0].0.description, header_type::DATA);
        assert_eq!(records[1].0.description, header_type::HB_FRAME);
        assert_eq!(records[2].0.description, header_type::PROCESSING);
    }

    #[test]
    fn test_adapt_empties_source() {
        let mut adapter = FrameworkAdapter::new(0, 1);
        let mut stf = sample_stf();
        stf.accept(&mut adapter).expect("visit");
        assert!(!stf.is_populated());
        assert_eq!(stf.equipment_count(), 0);
    }

    #[test]
    fn test_adapt_empty_shell_fails() {
        let mut adapter = FrameworkAdapter::new(0, 1);
        assert!(matches!(
            adapter.adapt(SubTimeFrame::default()),
            Err(StfError::Empty)
        ));
    }
}
