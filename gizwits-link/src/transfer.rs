/// One outbound payload being sent across one or more packets.
///
/// `offset` counts acknowledged bytes; `in_flight` is the length of the
/// packet written but not yet acknowledged. `offset + in_flight <= len`.
#[derive(Debug)]
pub struct Transfer {
    payload: Vec<u8>,
    offset: usize,
    in_flight: usize,
}

impl Transfer {
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            offset: 0,
            in_flight: 0,
        }
    }

    /// Slice the next packet of at most `max` bytes and mark it in flight.
    pub fn next_packet(&mut self, max: usize) -> &[u8] {
        let end = self.offset.saturating_add(max.max(1)).min(self.payload.len());
        self.in_flight = end - self.offset;
        &self.payload[self.offset..end]
    }

    /// The in-flight packet was written; advance past it.
    pub fn acknowledge(&mut self) {
        self.offset += self.in_flight;
        self.in_flight = 0;
    }

    pub fn is_complete(&self) -> bool {
        self.offset == self.payload.len()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::Transfer;

    #[test]
    fn cursor_advances_by_emitted_length() {
        let mut t = Transfer::new((0u8..45).collect());

        assert_eq!(t.next_packet(20).len(), 20);
        assert_eq!(t.offset(), 0);
        t.acknowledge();
        assert_eq!(t.offset(), 20);

        assert_eq!(t.next_packet(20), &(20u8..40).collect::<Vec<_>>()[..]);
        t.acknowledge();

        assert_eq!(t.next_packet(20).len(), 5);
        assert!(!t.is_complete());
        t.acknowledge();
        assert!(t.is_complete());
        assert_eq!(t.offset(), t.len());
    }

    #[test]
    fn repeated_slicing_does_not_advance() {
        let mut t = Transfer::new(vec![7; 30]);
        t.next_packet(20);
        t.next_packet(20);
        assert_eq!(t.in_flight(), 20);
        t.acknowledge();
        assert_eq!(t.offset(), 20);
    }
}
