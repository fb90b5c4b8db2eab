use nom::bytes::complete::take;
use nom::IResult;

/// The transcript MAC closing each side's last flight.
///
/// 12 bytes under the legacy PRF, a full hash output under the 1.3 schedule.
/// The caller knows which from the negotiated version and suite.
#[derive(Debug, PartialEq, Eq)]
pub struct Finished<'a> {
    pub verify_data: &'a [u8],
}

impl<'a> Finished<'a> {
    pub const LEGACY_VERIFY_DATA_LEN: usize = 12;

    pub fn new(verify_data: &'a [u8]) -> Self {
        Finished { verify_data }
    }

    pub fn parse(input: &'a [u8], verify_data_len: usize) -> IResult<&'a [u8], Finished<'a>> {
        let (input, verify_data) = take(verify_data_len)(input)?;
        Ok((input, Finished { verify_data }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(self.verify_data);
    }
}
