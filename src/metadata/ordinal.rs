/// Maps an Arabic ordinal or cardinal word ("الثاني", "الأولى", "خمسة", ...)
/// to its value. Only the closed set of forms for one through ten is known;
/// anything else, including an empty string, is `None`.
pub fn arabic_word_to_int(word: &str) -> Option<u32> {
    let value = match word.trim() {
        "الاول" | "الأول" | "الاولى" | "الأولى" | "واحد" => 1,
        "الثاني" | "الثانية" | "اثنين" => 2,
        "الثالث" | "الثالثة" | "ثلاثة" => 3,
        "الرابع" | "الرابعة" | "اربعة" => 4,
        "الخامس" | "الخامسة" | "خمسة" => 5,
        "السادس" | "السادسة" | "ستة" => 6,
        "السابع" | "السابعة" | "سبعة" => 7,
        "الثامن" | "الثامنة" | "ثمانية" => 8,
        "التاسع" | "التاسعة" | "تسعة" => 9,
        "العاشر" | "العاشرة" | "عشرة" => 10,
        _ => return None,
    };
    Some(value)
}
