use nom::error::{ErrorKind, ParseError};
use nom::{Err, IResult, InputLength, Parser};
use tinyvec::{Array, ArrayVec};

#[inline(always)]
pub fn many0<I, O, E, F, A>(mut f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    move |mut i: I| {
        let mut acc = ArrayVec::default();
        loop {
            let len = i.input_len();
            match f.parse(i.clone()) {
                Err(Err::Error(_)) => return Ok((i, acc)),
                Err(e) => return Err(e),
                Ok((i1, o)) => {
                    // infinite loop check: the parser must always consume
                    if i1.input_len() == len {
                        return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many0)));
                    }

                    // overlong lists are a parse error, not a panic
                    if acc.len() == A::CAPACITY {
                        return Err(Err::Failure(E::from_error_kind(i, ErrorKind::TooLarge)));
                    }

                    i = i1;
                    acc.push(o);
                }
            }
        }
    }
}

#[inline(always)]
pub fn many1<I, O, E, F, A>(mut f: F) -> impl FnMut(I) -> IResult<I, ArrayVec<A>, E>
where
    I: Clone + InputLength,
    F: Parser<I, O, E>,
    E: ParseError<I>,
    A: Array<Item = O>,
{
    move |mut i: I| match f.parse(i.clone()) {
        Err(Err::Error(err)) => Err(Err::Error(E::append(i, ErrorKind::Many1, err))),
        Err(e) => Err(e),
        Ok((i1, o)) => {
            let mut acc = ArrayVec::default();
            acc.push(o);
            i = i1;

            loop {
                let len = i.input_len();
                match f.parse(i.clone()) {
                    Err(Err::Error(_)) => return Ok((i, acc)),
                    Err(e) => return Err(e),
                    Ok((i1, o)) => {
                        // infinite loop check: the parser must always consume
                        if i1.input_len() == len {
                            return Err(Err::Error(E::from_error_kind(i, ErrorKind::Many1)));
                        }

                        if acc.len() == A::CAPACITY {
                            return Err(Err::Failure(E::from_error_kind(i, ErrorKind::TooLarge)));
                        }

                        i = i1;
                        acc.push(o);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nom::number::complete::be_u16;

    #[test]
    fn many1_requires_one() {
        let empty: &[u8] = &[];
        let r = many1::<_, _, nom::error::Error<&[u8]>, _, [u16; 4]>(be_u16)(empty);
        assert!(r.is_err());
    }

    #[test]
    fn many0_accepts_empty() {
        let empty: &[u8] = &[];
        let (rest, acc) = many0::<_, _, nom::error::Error<&[u8]>, _, [u16; 4]>(be_u16)(empty).unwrap();
        assert!(rest.is_empty());
        assert!(acc.is_empty());
    }

    #[test]
    fn overlong_list_fails() {
        let input: Vec<u8> = (0..12).collect();
        let r = many1::<_, _, nom::error::Error<&[u8]>, _, [u16; 4]>(be_u16)(&input[..]);
        assert!(r.is_err());
    }
}
