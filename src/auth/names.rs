//! Pronounceable random names for new invitations

const VOWELS: &str = "aeiou";
const CONSONANTS_COMMON: &str = "bcdfghjlmnprstv";
const CONSONANTS_RARE: &str = "kqwxyz";

fn pick(letters: &str) -> char {
    let bytes = letters.as_bytes();
    bytes[rand::random::<u32>() as usize % bytes.len()] as char
}

fn next_vowel() -> char {
    pick(VOWELS)
}

fn next_consonant() -> char {
    if rand::random::<u32>() % 3 == 0 {
        pick(CONSONANTS_RARE)
    } else {
        pick(CONSONANTS_COMMON)
    }
}

fn is_vowel(c: char) -> bool {
    VOWELS.contains(c)
}

/// Random capitalised name of 4 to 7 letters.
///
/// Never puts three consonants or three vowels in a row.
pub fn gen_human_name() -> String {
    let len = 4 + rand::random::<u32>() as usize % 4;
    let mut letters: Vec<char> = Vec::with_capacity(len);

    for _ in 0..len {
        let tail = &letters[letters.len().saturating_sub(2)..];
        let next = if tail.len() == 2 && tail.iter().all(|c| !is_vowel(*c)) {
            next_vowel()
        } else if tail.len() == 2 && tail.iter().all(|c| is_vowel(*c)) {
            next_consonant()
        } else if rand::random::<bool>() {
            next_vowel()
        } else {
            next_consonant()
        };
        letters.push(next);
    }

    let mut name: String = letters.into_iter().collect();
    if let Some(first) = name.get(0..1) {
        let upper = first.to_ascii_uppercase();
        name.replace_range(0..1, &upper);
    }
    name
}
