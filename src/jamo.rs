//! 韩文音节拆分为字母（자모），用于近音词比较

const SYLLABLE_BASE: u32 = 0xAC00;
const SYLLABLE_LAST: u32 = 0xD7A3;
const VOWEL_COUNT: u32 = 21;
const TRAILING_COUNT: u32 = 28;

const LEADING: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ', 'ㅌ',
    'ㅍ', 'ㅎ',
];

const VOWELS: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ', 'ㅞ', 'ㅟ',
    'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

/// 下标 0 表示无收音
const TRAILING: [Option<char>; 28] = [
    None,
    Some('ㄱ'),
    Some('ㄲ'),
    Some('ㄳ'),
    Some('ㄴ'),
    Some('ㄵ'),
    Some('ㄶ'),
    Some('ㄷ'),
    Some('ㄹ'),
    Some('ㄺ'),
    Some('ㄻ'),
    Some('ㄼ'),
    Some('ㄽ'),
    Some('ㄾ'),
    Some('ㄿ'),
    Some('ㅀ'),
    Some('ㅁ'),
    Some('ㅂ'),
    Some('ㅄ'),
    Some('ㅅ'),
    Some('ㅆ'),
    Some('ㅇ'),
    Some('ㅈ'),
    Some('ㅊ'),
    Some('ㅋ'),
    Some('ㅌ'),
    Some('ㅍ'),
    Some('ㅎ'),
];

/// 拆分单个音节；非韩文音节返回 None
pub fn decompose_syllable(c: char) -> Option<(char, char, Option<char>)> {
    let code = c as u32;
    if !(SYLLABLE_BASE..=SYLLABLE_LAST).contains(&code) {
        return None;
    }
    let index = code - SYLLABLE_BASE;
    let leading = index / (VOWEL_COUNT * TRAILING_COUNT);
    let vowel = (index % (VOWEL_COUNT * TRAILING_COUNT)) / TRAILING_COUNT;
    let trailing = index % TRAILING_COUNT;
    Some((
        LEADING[leading as usize],
        VOWELS[vowel as usize],
        TRAILING[trailing as usize],
    ))
}

/// 把文本拆成字母序列，其它字符原样保留
pub fn decompose(text: &str) -> Vec<char> {
    let mut units = Vec::with_capacity(text.len());
    for c in text.chars() {
        match decompose_syllable(c) {
            Some((leading, vowel, trailing)) => {
                units.push(leading);
                units.push(vowel);
                units.extend(trailing);
            }
            None => units.push(c),
        }
    }
    units
}

pub fn decompose_to_string(text: &str) -> String {
    decompose(text).into_iter().collect()
}

/// 字母层面的相似度，1 - 编辑距离 / 最大长度
pub fn similarity(a: &str, b: &str) -> f32 {
    let a = decompose_to_string(a);
    let b = decompose_to_string(b);
    let max_len = a.chars().count().max(b.chars().count());
    if a.is_empty() || b.is_empty() || max_len == 0 {
        return 0.0;
    }
    let distance = strsim::levenshtein(&a, &b);
    1.0 - distance as f32 / max_len as f32
}
