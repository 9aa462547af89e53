//! Depth sounder / water temperature reader (DPT, DBT, MTW)

use crate::core::DepthReading;
use crate::processing::sentence::{Sentence, SentenceHandler, SentenceKind};
use crate::sensors::SentenceReader;

pub type DepthReader = SentenceReader<DepthParser>;

impl DepthReader {
    pub fn sounder() -> Self {
        SentenceReader::new("depth", DepthParser::default())
    }

    pub fn reading(&self) -> &DepthReading {
        self.handler().reading()
    }
}

#[derive(Debug, Clone, Default)]
pub struct DepthParser {
    reading: DepthReading,
}

impl DepthParser {
    pub fn reading(&self) -> &DepthReading {
        &self.reading
    }
}

impl SentenceHandler for DepthParser {
    fn handle(&mut self, s: &Sentence<'_>, now_ms: u64) {
        if !s.has_required_fields() {
            return;
        }
        let reading = &mut self.reading;
        match s.kind() {
            // DPT,<depth_m>,<offset_m>[,<range>]
            SentenceKind::Dpt => {
                if let Some(depth) = s.float(1) {
                    reading.depth_m = Some(depth);
                }
                if let Some(offset) = s.float(2) {
                    reading.offset_m = Some(offset);
                }
            }
            // DBT,<feet>,f,<meters>,M,<fathoms>,F
            SentenceKind::Dbt => {
                if let Some(depth) = s.float(3) {
                    reading.depth_m = Some(depth);
                }
            }
            // MTW,<celsius>,C
            SentenceKind::Mtw => {
                if let Some(temp) = s.float(1) {
                    reading.temperature_c = Some(temp);
                }
            }
            _ => return,
        }
        reading.last_update_ms = Some(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::MockPort;

    #[test]
    fn test_depth_sentences() {
        let mut port = MockPort::new("depth");
        let mut reader = DepthReader::sounder();

        port.push_sentence("SDDPT,12.4,0.3");
        reader.poll(&mut port, 10);
        assert_eq!(reader.reading().depth_m, Some(12.4));
        assert_eq!(reader.reading().offset_m, Some(0.3));

        port.push_sentence("SDDBT,42.0,f,12.8,M,7.0,F");
        port.push_sentence("SDMTW,14.5,C");
        reader.poll(&mut port, 20);
        let reading = reader.reading();
        assert_eq!(reading.depth_m, Some(12.8));
        assert_eq!(reading.offset_m, Some(0.3));
        assert_eq!(reading.temperature_c, Some(14.5));
        assert_eq!(reading.last_update_ms, Some(20));
    }

    #[test]
    fn test_other_sentences_ignored() {
        let mut port = MockPort::new("depth");
        let mut reader = DepthReader::sounder();
        port.push_sentence("GPHDT,10.0,T");
        port.push_sentence("SDDBT,42.0,f");
        reader.poll(&mut port, 10);
        assert_eq!(reader.reading(), &DepthReading::default());
    }
}
